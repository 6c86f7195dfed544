pub const DEFAULT_CITY: &str = "Edmonton";

// Costco pharmacy (TeleHippo backend)
pub const COSTCO_DIRECTORY_URL: &str = "https://www.costcopharmacy.ca/assets/json/app.clinics.json";
pub const COSTCO_GRAPHQL_BASE: &str = "https://apipharmacy.telehippo.com/api/c";
pub const COSTCO_SERVICE_ID: i64 = 988;

// London Drugs (hq3 ASP.NET appointment pages)
pub const LONDON_DRUGS_BASE_URL: &str = "https://www.hq3.ca/057/Public/Appointments/";
pub const LANDING_PAGE: &str = "Default.aspx";
pub const CALENDAR_PAGE: &str = "NewAppointment/Calendar2.aspx";
pub const COVID_CATEGORY_TEXT: &str = "COVID-19";

// HTML selectors used on the hq3 pages
pub const HIDDEN_INPUT_SELECTOR: &str = r#"input[type="hidden"]"#;
pub const SERVICE_CATEGORY_LINK_SELECTOR: &str = ".servicecategory a";
pub const ASPNET_FORM_SELECTOR: &str = "#aspnetForm";
pub const TIMESLOT_SELECTOR: &str = ".timeslots a";
pub const TIMESLOT_ATTR: &str = "timeutc";
pub const EVENT_TARGET_FIELD: &str = "__EVENTTARGET";

// Safeway / Sobeys (pharmacyappointments.ca)
pub const SAFEWAY_API_BASE: &str = "https://api.pharmacyappointments.ca/public";
pub const SAFEWAY_SITE_URL: &str = "https://www.pharmacyappointments.ca";
pub const SAFEWAY_PROVINCE: &str = "Alberta";
pub const EDMONTON_LAT: f64 = 53.5461245;
pub const EDMONTON_LNG: f64 = -113.4938229;
pub const SAFEWAY_DOSE_NUMBER: u8 = 1;
pub const SAFEWAY_POOL: &str = "default";

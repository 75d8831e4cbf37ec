//! Column vocabulary shared by the loaders, the cleaning pipeline and the outputs.
//!
//! Raw column names are the ones found in the weather station and traffic
//! counter exports; engineered names are produced by the feature step.

/// Global irradiance (W/m²)
pub const IRRADIANCE: &str = "Globalstraling";
/// Sunshine duration within the sampling interval
pub const SUNSHINE_DURATION: &str = "Solskinstid";
/// Air temperature (°C)
pub const AIR_TEMPERATURE: &str = "Lufttemperatur";
/// Air pressure (hPa)
pub const AIR_PRESSURE: &str = "Lufttrykk";
/// Wind gust (m/s)
pub const WIND_GUST: &str = "Vindkast";
/// Wind direction (degrees)
pub const WIND_DIRECTION: &str = "Vindretning";
/// Wind speed (m/s)
pub const WIND_SPEED: &str = "Vindstyrke";
/// Relative humidity; only present in the most recent station exports
pub const RELATIVE_HUMIDITY: &str = "Relativ luftfuktighet";

/// Weather file date column
pub const WEATHER_DATE: &str = "Dato";
/// Weather file time column
pub const WEATHER_TIME: &str = "Tid";

/// Traffic file interval start
pub const TRAFFIC_FROM: &str = "Fra";
/// Traffic file lane/direction label
pub const TRAFFIC_LANE: &str = "Felt";
/// Traffic file count
pub const TRAFFIC_VOLUME: &str = "Trafikkmengde";
/// Lane labels that carry the per-direction totals
pub const TRAFFIC_TOTAL_LANES: [&str; 2] = [
    "Totalt i retning Danmarksplass",
    "Totalt i retning Florida",
];

/// Raw count towards Florida after pivoting the traffic file
pub const COUNT_TOWARDS_FLORIDA: &str = "Trafikkmengde_Totalt_i_retning_Florida";
/// Raw count towards Danmarksplass after pivoting the traffic file
pub const COUNT_TOWARDS_DANMARKSPLASS: &str = "Trafikkmengde_Totalt_i_retning_Danmarksplass";

/// Combined hourly cycle count; the regression target
pub const TOTAL_TRAFFIC: &str = "Total_trafikk";

/// Engineered calendar and weather features
pub const HOUR: &str = "hour";
pub const MONTH: &str = "month";
pub const WEEKEND: &str = "weekend";
pub const PUBLIC_HOLIDAY: &str = "public_holiday";
pub const RAINING: &str = "raining";
pub const SUMMER: &str = "summer";
pub const WINTER: &str = "winter";
pub const RUSH_HOUR: &str = "rush_hour";
pub const SLEEPTIME: &str = "sleeptime";
pub const WIND_DIRECTION_RADIANS: &str = "Vindretning_radians";
pub const WIND_DIRECTION_X: &str = "Vindretning_x";
pub const WIND_DIRECTION_Y: &str = "Vindretning_y";

/// One indicator column per weekday, Monday first
pub const WEEKDAY_COLUMNS: [&str; 7] = [
    "d_Monday",
    "d_Tuesday",
    "d_Wednesday",
    "d_Thursday",
    "d_Friday",
    "d_Saturday",
    "d_Sunday",
];

/// Prediction output columns
pub const OUTPUT_DATE: &str = "Dato";
pub const OUTPUT_HOUR: &str = "Tid";
pub const OUTPUT_PREDICTION: &str = "Prediksjon";

/// Build the pivoted column name for a traffic lane label
pub fn pivoted_count_column(lane: &str) -> String {
    format!("{}_{}", TRAFFIC_VOLUME, lane.replace(' ', "_"))
}

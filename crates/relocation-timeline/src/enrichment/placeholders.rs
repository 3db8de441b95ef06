//! `{{placeholder}}` rendering and research query suggestions.
//!
//! Tokens are case-insensitive and may contain whitespace inside the braces,
//! e.g. `{{ Destination_City }}`. Known tokens without a profile value render
//! as an empty string. Unknown tokens are left as written.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};

use relocation_core::{RelocationProfile, ResearchAction, Task};

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_]+)\s*\}\}").expect("Invalid placeholder regex"));

static REPEATED_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("Invalid whitespace regex"));

static CITY_COUNTRIES: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    HashMap::from([
        ("paris", "France"),
        ("london", "United Kingdom"),
        ("berlin", "Germany"),
        ("munich", "Germany"),
        ("hamburg", "Germany"),
        ("frankfurt", "Germany"),
        ("madrid", "Spain"),
        ("barcelona", "Spain"),
        ("rome", "Italy"),
        ("milan", "Italy"),
        ("amsterdam", "Netherlands"),
        ("zurich", "Switzerland"),
        ("geneva", "Switzerland"),
        ("vienna", "Austria"),
        ("copenhagen", "Denmark"),
        ("stockholm", "Sweden"),
        ("oslo", "Norway"),
        ("helsinki", "Finland"),
        ("new york", "United States"),
        ("new york city", "United States"),
        ("san francisco", "United States"),
        ("los angeles", "United States"),
        ("chicago", "United States"),
        ("boston", "United States"),
        ("seattle", "United States"),
        ("toronto", "Canada"),
        ("vancouver", "Canada"),
        ("montreal", "Canada"),
        ("sydney", "Australia"),
        ("melbourne", "Australia"),
        ("brisbane", "Australia"),
        ("tokyo", "Japan"),
        ("singapore", "Singapore"),
        ("hong kong", "Hong Kong"),
        ("dublin", "Ireland"),
        ("edinburgh", "United Kingdom"),
        ("lisbon", "Portugal"),
        ("brussels", "Belgium"),
        ("prague", "Czech Republic"),
        ("budapest", "Hungary"),
        ("warsaw", "Poland"),
        ("dubai", "United Arab Emirates"),
        ("mumbai", "India"),
        ("bangalore", "India"),
        ("bengaluru", "India"),
        ("delhi", "India"),
        ("new delhi", "India"),
        ("beijing", "China"),
        ("shanghai", "China"),
        ("seoul", "South Korea"),
        ("bangkok", "Thailand"),
        ("kuala lumpur", "Malaysia"),
        ("jakarta", "Indonesia"),
        ("manila", "Philippines"),
        ("mexico city", "Mexico"),
        ("bogota", "Colombia"),
        ("buenos aires", "Argentina"),
        ("são paulo", "Brazil"),
        ("sao paulo", "Brazil"),
        ("rio de janeiro", "Brazil"),
        ("santiago", "Chile"),
        ("lima", "Peru"),
        ("tel aviv", "Israel"),
        ("cairo", "Egypt"),
        ("johannesburg", "South Africa"),
        ("cape town", "South Africa"),
        ("nairobi", "Kenya"),
        ("lagos", "Nigeria"),
    ])
});

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Country for a known city. Unknown cities echo the city name itself.
pub fn country_for_city(city: &str) -> Option<String> {
    let city = city.trim();
    if city.is_empty() {
        return None;
    }
    Some(
        CITY_COUNTRIES
            .get(city.to_lowercase().as_str())
            .map(|country| country.to_string())
            .unwrap_or_else(|| city.to_string()),
    )
}

/// Values substituted into `{{placeholder}}` tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderValues {
    pub destination_city: Option<String>,
    pub destination_country: Option<String>,
    pub origin_city: Option<String>,
    pub origin_country: Option<String>,
    pub current_year: i32,
}

impl PlaceholderValues {
    /// Values for `profile`. The year is passed in so that rendering never
    /// depends on the wall clock.
    pub fn from_profile(profile: &RelocationProfile, current_year: i32) -> Self {
        let destination_city = non_blank(profile.to_city.as_deref());
        let origin_city = non_blank(profile.from_city.as_deref());
        Self {
            destination_country: destination_city.as_deref().and_then(country_for_city),
            origin_country: origin_city.as_deref().and_then(country_for_city),
            destination_city,
            origin_city,
            current_year,
        }
    }

    fn lookup(&self, token: &str) -> Option<String> {
        match token.to_ascii_lowercase().as_str() {
            "destination_city" => Some(self.destination_city.clone().unwrap_or_default()),
            "destination_country" => Some(self.destination_country.clone().unwrap_or_default()),
            "origin_city" => Some(self.origin_city.clone().unwrap_or_default()),
            "origin_country" => Some(self.origin_country.clone().unwrap_or_default()),
            "current_year" => Some(self.current_year.to_string()),
            _ => None,
        }
    }

    /// Substitute every known token, then squash runs of whitespace and trim.
    pub fn render(&self, text: &str) -> String {
        if !text.contains("{{") {
            return text.to_string();
        }
        let substituted = TOKEN.replace_all(text, |caps: &Captures| {
            self.lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        });
        REPEATED_SPACE
            .replace_all(&substituted, " ")
            .trim()
            .to_string()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `for <Month YYYY>` when the move date is an ISO date.
fn move_date_phrase(profile: &RelocationProfile) -> Option<String> {
    let raw = profile.move_date.as_deref()?.trim();
    let date = NaiveDate::parse_from_str(raw.get(..10).unwrap_or(raw), "%Y-%m-%d").ok()?;
    Some(format!("for {}", date.format("%B %Y")))
}

/// Whether `query` already carries route context.
fn mentions_route(query: &str, profile: &RelocationProfile) -> bool {
    let lower = query.to_lowercase();
    let cities = [profile.from_city.as_deref(), profile.to_city.as_deref()];
    for city in cities.into_iter().flatten() {
        let country = country_for_city(city).map(|c| c.to_lowercase());
        if country.is_some_and(|c| lower.contains(&c)) {
            return true;
        }
        let city = city.trim().to_lowercase();
        if !city.is_empty() && lower.contains(&city) {
            return true;
        }
    }
    // Visa queries are tailored by hand and already name their countries.
    lower.contains("visa") || lower.contains("biometrics")
}

/// Query pre-filled into a task's research prompt.
///
/// The action's default query is rendered against the profile. Route and
/// timeframe context is appended unless the rendered query already names the
/// route. Without a default query, `<title> <service label>` is used.
pub fn build_suggested_query(
    action: &ResearchAction,
    task: &Task,
    service_label: &str,
    profile: &RelocationProfile,
    current_year: i32,
) -> String {
    let values = PlaceholderValues::from_profile(profile, current_year);
    let timeframe = task.timeframe.trim();
    let mut pieces: Vec<String> = Vec::new();

    let default_query = action
        .default_query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty());

    match default_query {
        Some(query) => {
            let rendered = values.render(query);
            if mentions_route(&rendered, profile) {
                let is_visa = rendered.to_lowercase().contains("visa");
                pieces.push(rendered);
                if !timeframe.is_empty() {
                    pieces.push(format!("timeline {}", timeframe));
                }
                if !is_visa {
                    pieces.extend(move_date_phrase(profile));
                }
                return collapse_whitespace(&pieces.join(" "));
            }
            pieces.push(rendered);
        }
        None => pieces.push(format!("{} {}", task.title, service_label.to_lowercase())),
    }

    if !timeframe.is_empty() {
        pieces.push(format!("timeline {}", timeframe));
    }
    if let Some(to) = non_blank(profile.to_city.as_deref()) {
        pieces.push(format!("in {}", to));
    }
    if let Some(from) = non_blank(profile.from_city.as_deref()) {
        pieces.push(format!("from {}", from));
    }
    pieces.extend(move_date_phrase(profile));

    collapse_whitespace(&pieces.join(" "))
}

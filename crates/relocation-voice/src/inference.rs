//! Relocation route inference from the user's transcribed speech.

use std::sync::LazyLock;

use regex::Regex;

use relocation_core::{ProfileUpdate, RelocationProfile};

static FULL_ROUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)from\s+([A-Za-z\s]+?)\s+(?:to|->|towards)\s+([A-Za-z\s]+)")
        .expect("Invalid route regex")
});

static MOVING_TO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)moving to\s+([A-Za-z\s]+)").expect("Invalid destination regex")
});

static MOVING_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)moving from\s+([A-Za-z\s]+)").expect("Invalid origin regex")
});

/// Words that end a captured city name.
static CITY_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(?:from|to|towards|in|next|by|on|this|at)\b.*$")
        .expect("Invalid city tail regex")
});

/// Cities heard in one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteHint {
    pub from_city: Option<String>,
    pub to_city: Option<String>,
}

fn clean_city(raw: &str) -> Option<String> {
    let city = CITY_TAIL.replace(raw.trim(), "");
    let city = city.trim();
    (!city.is_empty()).then(|| city.to_string())
}

/// Scan `text` for a route mention.
///
/// A full "from X to Y" route wins. Otherwise "moving to X" and
/// "moving from X" are reported separately.
pub fn infer_route(text: &str) -> Option<RouteHint> {
    if let Some(caps) = FULL_ROUTE.captures(text) {
        let from_city = caps.get(1).and_then(|m| clean_city(m.as_str()));
        let to_city = caps.get(2).and_then(|m| clean_city(m.as_str()));
        if from_city.is_some() && to_city.is_some() {
            return Some(RouteHint { from_city, to_city });
        }
    }

    let to_city = MOVING_TO
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| clean_city(m.as_str()));
    let from_city = MOVING_FROM
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| clean_city(m.as_str()));

    (to_city.is_some() || from_city.is_some()).then_some(RouteHint { from_city, to_city })
}

/// Profile update implied by `text` given the current profile.
///
/// A full route overwrites both cities. A single city only fills a field
/// that is still empty. Returns `None` when nothing would change.
pub fn infer_profile_update(text: &str, current: &RelocationProfile) -> Option<ProfileUpdate> {
    let hint = infer_route(text)?;

    if let (Some(from_city), Some(to_city)) = (&hint.from_city, &hint.to_city) {
        if FULL_ROUTE.is_match(text) {
            return Some(ProfileUpdate {
                from_city: Some(from_city.clone()),
                to_city: Some(to_city.clone()),
                move_date: None,
            });
        }
    }

    if let Some(to_city) = hint.to_city.filter(|_| current.to_city.is_none()) {
        return Some(ProfileUpdate {
            to_city: Some(to_city),
            ..Default::default()
        });
    }
    if let Some(from_city) = hint.from_city.filter(|_| current.from_city.is_none()) {
        return Some(ProfileUpdate {
            from_city: Some(from_city),
            ..Default::default()
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_route() {
        assert_eq!(
            infer_route("We're going from San Francisco to Berlin"),
            Some(RouteHint {
                from_city: Some("San Francisco".into()),
                to_city: Some("Berlin".into()),
            })
        );
        assert_eq!(
            infer_route("relocating from Paris towards Lisbon next spring"),
            Some(RouteHint {
                from_city: Some("Paris".into()),
                to_city: Some("Lisbon".into()),
            })
        );
    }

    #[test]
    fn test_single_city_mentions() {
        assert_eq!(
            infer_route("I'm moving to Toronto in March"),
            Some(RouteHint {
                from_city: None,
                to_city: Some("Toronto".into()),
            })
        );
        assert_eq!(
            infer_route("moving from Austin"),
            Some(RouteHint {
                from_city: Some("Austin".into()),
                to_city: None,
            })
        );
        assert_eq!(infer_route("I need a bank account"), None);
    }

    #[test]
    fn test_full_route_overwrites_profile() {
        let current = RelocationProfile {
            from_city: Some("Rome".into()),
            to_city: Some("Oslo".into()),
            ..Default::default()
        };
        let update = infer_profile_update("from Madrid to Dublin", &current).unwrap();
        assert_eq!(update.from_city.as_deref(), Some("Madrid"));
        assert_eq!(update.to_city.as_deref(), Some("Dublin"));
    }

    #[test]
    fn test_single_city_only_fills_empty_field() {
        let empty = RelocationProfile::default();
        let update = infer_profile_update("we are moving to Berlin", &empty).unwrap();
        assert_eq!(update.to_city.as_deref(), Some("Berlin"));
        assert_eq!(update.from_city, None);

        let known = RelocationProfile {
            to_city: Some("Munich".into()),
            ..Default::default()
        };
        assert_eq!(infer_profile_update("we are moving to Berlin", &known), None);
    }

    #[test]
    fn test_origin_fills_when_destination_known() {
        let known = RelocationProfile {
            to_city: Some("Munich".into()),
            ..Default::default()
        };
        let update =
            infer_profile_update("moving to Berlin, well moving from Prague", &known).unwrap();
        assert_eq!(update.from_city.as_deref(), Some("Prague"));
        assert_eq!(update.to_city, None);
    }
}

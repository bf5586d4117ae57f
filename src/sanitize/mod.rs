//! Path segments for grouped and per-entity documents.
//!
//! Two rules exist and are not interchangeable: [`safe_filename`] for codes,
//! regions and types, [`timezone_filename`] for IANA timezone names.

/// Lower-case `raw`, map everything outside `[a-z0-9-]` to `-`, collapse
/// dash runs and trim dashes at both ends. Falls back when nothing is left.
pub fn safe_filename(raw: Option<&str>, fallback: &str) -> String {
    let Some(raw) = raw else {
        return fallback.to_string();
    };

    let mut out = String::with_capacity(raw.len());
    for ch in raw.to_lowercase().chars() {
        let ch = if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
            ch
        } else {
            '-'
        };
        if ch == '-' && out.ends_with('-') {
            continue;
        }
        out.push(ch);
    }

    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Replace every character outside `[A-Za-z0-9]` with `-`, keeping case and
/// dash runs: `America/Port-au-Prince` becomes `America-Port-au-Prince`.
pub fn timezone_filename(timezone: &str) -> String {
    timezone
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_codes() {
        assert_eq!(safe_filename(Some("USA"), "1"), "usa");
        assert_eq!(safe_filename(Some("US-CA"), "1"), "us-ca");
    }

    #[test]
    fn collapses_and_trims_separators() {
        assert_eq!(
            safe_filename(Some("Latin America & the Caribbean"), "0"),
            "latin-america-the-caribbean"
        );
        assert_eq!(safe_filename(Some("--Polar--"), "0"), "polar");
        assert_eq!(safe_filename(Some("autonomous  city"), "0"), "autonomous-city");
    }

    #[test]
    fn falls_back_when_nothing_survives() {
        assert_eq!(safe_filename(None, "42"), "42");
        assert_eq!(safe_filename(Some(""), "42"), "42");
        assert_eq!(safe_filename(Some("!!!"), "42"), "42");
        assert_eq!(safe_filename(Some("ÅÄÖ"), "7"), "7");
    }

    #[test]
    fn is_deterministic() {
        let once = safe_filename(Some("Région de Bruxelles"), "x");
        assert_eq!(once, safe_filename(Some("Région de Bruxelles"), "x"));
        assert_eq!(once, "r-gion-de-bruxelles");
    }

    #[test]
    fn timezone_rule_keeps_case_and_runs() {
        assert_eq!(timezone_filename("Asia/Kabul"), "Asia-Kabul");
        assert_eq!(
            timezone_filename("America/Argentina/Buenos_Aires"),
            "America-Argentina-Buenos-Aires"
        );
        assert_eq!(timezone_filename("Etc/GMT+10"), "Etc-GMT-10");
        assert_ne!(timezone_filename("Asia/Kabul"), safe_filename(Some("Asia/Kabul"), "0"));
    }
}

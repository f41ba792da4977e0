use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::listings::Grade;

static RE_TRAILING_QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)(\d+)\s*$").expect("trailing quantity regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedItem {
    pub product: String,
    pub quantity: u32,
    /// Unknown at parse time; set only by an inspection.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "grade_serde")]
    pub grade: Option<Grade>,
}

/// One item per non-empty line. A trailing integer is the quantity,
/// everything before it the product name. Lines without one count as a
/// single unit. Heuristic only: the product name may come out empty.
pub fn parse_items(text: &str) -> Vec<ParsedItem> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> ParsedItem {
    let parsed = RE_TRAILING_QUANTITY.captures(line).and_then(|caps| {
        let quantity = caps[2].parse::<u32>().ok()?;
        Some(ParsedItem {
            product: caps[1].trim().to_string(),
            quantity,
            grade: None,
        })
    });

    parsed.unwrap_or_else(|| ParsedItem {
        product: line.to_string(),
        quantity: 1,
        grade: None,
    })
}

mod grade_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::listings::Grade;

    pub fn serialize<S: Serializer>(grade: &Option<Grade>, s: S) -> Result<S::Ok, S::Error> {
        match grade {
            Some(g) => s.serialize_str(g.as_str()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Grade>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        Ok(raw.as_deref().and_then(Grade::parse))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product: &str, quantity: u32) -> ParsedItem {
        ParsedItem {
            product: product.to_string(),
            quantity,
            grade: None,
        }
    }

    #[test]
    fn trailing_number_is_quantity() {
        let items = parse_items("Dell Latitude E7450   3\nLogitech mouse 12\n");
        assert_eq!(items, vec![item("Dell Latitude E7450", 3), item("Logitech mouse", 12)]);
    }

    #[test]
    fn lines_without_number_count_once() {
        let items = parse_items("  Samsung monitor  \n\n   \nHDMI cable x");
        assert_eq!(items, vec![item("Samsung monitor", 1), item("HDMI cable x", 1)]);
    }

    #[test]
    fn digits_glued_to_words_still_split() {
        // The quantity takes every trailing digit.
        assert_eq!(parse_items("iPhone12"), vec![item("iPhone", 12)]);
        assert_eq!(parse_items("42"), vec![item("", 42)]);
    }

    #[test]
    fn overflowing_quantity_falls_back_to_whole_line() {
        let line = "Router 99999999999999999999";
        assert_eq!(parse_items(line), vec![item(line, 1)]);
    }

    #[test]
    fn windows_line_endings() {
        assert_eq!(
            parse_items("Keyboard 2\r\nCharger\r\n"),
            vec![item("Keyboard", 2), item("Charger", 1)]
        );
    }

    #[test]
    fn parsing_is_deterministic() {
        let text = "ThinkPad T480 4\nSSD 256GB\nPower brick 7";
        assert_eq!(parse_items(text), parse_items(text));
    }

    #[test]
    fn serialized_item_omits_unknown_grade() {
        let json = serde_json::to_value(item("Tablet", 2)).unwrap();
        assert_eq!(json, serde_json::json!({ "product": "Tablet", "quantity": 2 }));
        let back: ParsedItem =
            serde_json::from_value(serde_json::json!({ "product": "Tablet", "quantity": 2, "grade": "B" }))
                .unwrap();
        assert_eq!(back.grade, Some(Grade::B));
    }
}

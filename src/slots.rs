/// Bookable time slots. The code is what customers submit and what gets
/// stored; the label is the human-readable range used in the operator
/// email and the CSV backup.
pub const TIME_SLOTS: [(&str, &str); 8] = [
    ("09:00", "09:00 AM - 10:00 AM"),
    ("10:00", "10:00 AM - 11:00 AM"),
    ("11:00", "11:00 AM - 12:00 PM"),
    ("12:00", "12:00 PM - 01:00 PM"),
    ("14:00", "02:00 PM - 03:00 PM"),
    ("15:00", "03:00 PM - 04:00 PM"),
    ("16:00", "04:00 PM - 05:00 PM"),
    ("17:00", "05:00 PM - 06:00 PM"),
];

pub fn is_valid_slot(code: &str) -> bool {
    TIME_SLOTS.iter().any(|(slot, _)| *slot == code)
}

/// Display label for a slot code. Unrecognized codes pass through verbatim
/// so historical rows with retired slots still render.
pub fn slot_label(code: &str) -> &str {
    TIME_SLOTS
        .iter()
        .find(|(slot, _)| *slot == code)
        .map(|(_, label)| *label)
        .unwrap_or(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_map_to_ranges() {
        assert_eq!(slot_label("09:00"), "09:00 AM - 10:00 AM");
        assert_eq!(slot_label("14:00"), "02:00 PM - 03:00 PM");
        assert_eq!(slot_label("17:00"), "05:00 PM - 06:00 PM");
    }

    #[test]
    fn unknown_codes_pass_through() {
        assert_eq!(slot_label("13:00"), "13:00");
        assert_eq!(slot_label("whenever"), "whenever");
    }

    #[test]
    fn validation_matches_the_table() {
        assert!(is_valid_slot("11:00"));
        assert!(!is_valid_slot("13:00"));
        assert!(!is_valid_slot(""));
    }
}

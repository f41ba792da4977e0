use rand::seq::SliceRandom;
use rand::Rng;

use super::{Grade, ListingKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub grade: Grade,
    pub price: Option<i32>,
}

/// Decides grade and offer for a listing leaving Processing.
pub trait GradingStrategy: Send + Sync {
    fn assess(&self, kind: ListingKind) -> Assessment;
}

/// Placeholder policy until a real inspection workflow exists: uniform
/// grade, uniform price inside the grade's range.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomGrader;

impl GradingStrategy for RandomGrader {
    fn assess(&self, kind: ListingKind) -> Assessment {
        let mut rng = rand::thread_rng();
        let grade = *Grade::ALL.choose(&mut rng).unwrap_or(&Grade::C);
        let price = match kind {
            ListingKind::Sell => Some(rng.gen_range(grade.price_range())),
            ListingKind::Donate => None,
        };
        Assessment { grade, price }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sell_price_stays_in_grade_range() {
        let mut grades = HashSet::new();
        for _ in 0..2000 {
            let a = RandomGrader.assess(ListingKind::Sell);
            let price = a.price.expect("sell listings are priced");
            assert!(a.grade.price_range().contains(&price), "{:?} {}", a.grade, price);
            grades.insert(a.grade);
        }
        assert_eq!(grades.len(), 3);
    }

    #[test]
    fn donations_are_never_priced() {
        for _ in 0..200 {
            assert_eq!(RandomGrader.assess(ListingKind::Donate).price, None);
        }
    }

    #[test]
    fn ranges_match_grades() {
        assert_eq!(Grade::A.price_range(), 1200..2000);
        assert_eq!(Grade::B.price_range(), 600..1000);
        assert_eq!(Grade::C.price_range(), 150..500);
    }
}

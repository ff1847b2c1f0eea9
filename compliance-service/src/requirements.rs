use crate::types::{CheckCategory, InsuranceType, PartnerRequirements, PartnerType};
use rust_decimal::Decimal;
use trust_ledger::TrustLevel;

/// Onboarding minimums per partner type
pub fn requirements_for(partner_type: PartnerType) -> PartnerRequirements {
    use CheckCategory::{Criminal, Employment};
    use InsuranceType::{Liability, Professional, Property};

    match partner_type {
        PartnerType::Hotel => PartnerRequirements {
            min_trust_level: TrustLevel::IDENTITY_VERIFIED,
            background_checks: vec![Criminal, Employment],
            insurance_types: vec![Liability, Property],
            minimum_coverage: Decimal::from(500_000),
        },
        PartnerType::TourGuide => PartnerRequirements {
            min_trust_level: TrustLevel::CONTACT_VERIFIED,
            background_checks: vec![Criminal],
            insurance_types: vec![Liability],
            minimum_coverage: Decimal::from(100_000),
        },
        PartnerType::CarRental => PartnerRequirements {
            min_trust_level: TrustLevel::IDENTITY_VERIFIED,
            background_checks: vec![Criminal],
            insurance_types: vec![Liability, Professional],
            minimum_coverage: Decimal::from(1_000_000),
        },
        PartnerType::Restaurant => PartnerRequirements {
            min_trust_level: TrustLevel::IDENTITY_VERIFIED,
            background_checks: vec![Criminal, Employment],
            insurance_types: vec![Liability, Property],
            minimum_coverage: Decimal::from(300_000),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_partner_type_uses_hotel() {
        let unknown = requirements_for(PartnerType::parse("yacht_charter"));
        assert_eq!(unknown, requirements_for(PartnerType::Hotel));
        assert_eq!(unknown.minimum_coverage, Decimal::from(500_000));
    }

    #[test]
    fn test_tour_guide_is_lighter() {
        let guide = requirements_for(PartnerType::parse("tour_guide"));
        assert_eq!(guide.min_trust_level, TrustLevel::CONTACT_VERIFIED);
        assert_eq!(guide.background_checks, vec![CheckCategory::Criminal]);
    }
}

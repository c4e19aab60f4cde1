use serde::Serialize;

/// A purchasable listing length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListingTier {
    pub days: u32,
    /// Price in whole US dollars.
    pub price: u32,
    pub description: &'static str,
}

impl ListingTier {
    pub fn unit_amount_cents(&self) -> u64 {
        u64::from(self.price) * 100
    }

    pub fn product_name(&self) -> String {
        format!("Job Posting - {} Days", self.days)
    }
}

pub const LISTING_TIERS: [ListingTier; 3] = [
    ListingTier {
        days: 30,
        price: 99,
        description: "Standard listing",
    },
    ListingTier {
        days: 60,
        price: 179,
        description: "Extended visibility",
    },
    ListingTier {
        days: 90,
        price: 249,
        description: "Maximum exposure",
    },
];

pub fn tier_for_duration(days: u32) -> Option<ListingTier> {
    LISTING_TIERS.iter().copied().find(|tier| tier.days == days)
}

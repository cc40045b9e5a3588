use crate::model::Source;

/// Upper bound of the common rating scale.
pub const RATING_SCALE_MAX: f64 = 10.0;

/// How a source's native rating maps onto the common 0-10 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingStrategy {
    /// Value already lies on 0-10 (IMDb averageRating, TMDb vote_average).
    ZeroToTen,
    /// Mean of half-star ratings on 0.5-5; doubled.
    HalfStarsToFive,
}

impl RatingStrategy {
    pub fn for_source(source: Source) -> Self {
        match source {
            Source::Movielens => RatingStrategy::HalfStarsToFive,
            Source::Imdb | Source::Tmdb => RatingStrategy::ZeroToTen,
        }
    }

    /// Rescale to 0-10. Non-finite or out-of-range results are unknown.
    pub fn to_common_scale(self, value: f64) -> Option<f64> {
        let rating = match self {
            RatingStrategy::ZeroToTen => value,
            RatingStrategy::HalfStarsToFive => value * 2.0,
        };
        if rating.is_finite() && (0.0..=RATING_SCALE_MAX).contains(&rating) {
            Some(rating)
        } else {
            None
        }
    }
}

/// Convenience wrapper used by the per-source mappers.
pub fn scale_rating_to_10(value: Option<f64>, source: Source) -> Option<f64> {
    RatingStrategy::for_source(source).to_common_scale(value?)
}

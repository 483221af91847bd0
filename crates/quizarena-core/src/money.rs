//! Integer money arithmetic.
//!
//! Amounts are unsigned integers in the smallest currency unit and rakes are
//! basis points, so no floating-point value ever touches a balance.

/// Denominator for basis-point arithmetic.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Operator cut of `gross`: `floor(gross × rake_bps / 10_000)`.
///
/// `rake_bps` above 10 000 is treated as 10 000.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn rake_of(gross: u64, rake_bps: u32) -> u64 {
    let bps = u128::from(rake_bps.min(BPS_DENOMINATOR));
    // Result is at most `gross`, so it fits back into u64.
    ((u128::from(gross) * bps) / u128::from(BPS_DENOMINATOR)) as u64
}

/// Distributable amount after the rake.
#[must_use]
pub fn net_of(gross: u64, rake_bps: u32) -> u64 {
    gross - rake_of(gross, rake_bps)
}

/// Share of `amount` for `share_bps`, rounded to the nearest unit with ties
/// toward zero.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn share_of(amount: u64, share_bps: u32) -> u64 {
    let numerator = u128::from(amount) * u128::from(share_bps);
    let denominator = u128::from(BPS_DENOMINATOR);
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    let rounded = if remainder * 2 > denominator {
        quotient + 1
    } else {
        quotient
    };
    rounded as u64
}

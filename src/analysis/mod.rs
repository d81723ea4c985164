/// Data organization for the tide table generator.
///
/// Submodules:
/// - `groupings` — turns a month of flat tide events into per-day groups
///   annotated with coefficients.

pub mod groupings;

//! Shared weight arithmetic for the tropical (min-plus) semiring.

/// Weight of an arc, a path or a rule alternative. Path weight is the
/// sum of arc weights; the best path is the minimum total weight.
pub type Weight = f64;

/// Round a weight to a fixed number of decimal places.
pub(crate) fn round_to(w: Weight, places: i32) -> Weight {
    let factor = 10f64.powi(places);
    (w * factor).round() / factor
}

/// Format a weight the way Python's `str(float)` would, so emitted
/// specifications stay byte-compatible with the record contract:
/// integral values keep one decimal (`0.0`, `1.0`), everything else
/// prints its shortest form (`0.301`).
pub(crate) fn fmt_weight(w: Weight) -> String {
    if w == w.trunc() {
        format!("{:.1}", w)
    } else {
        format!("{}", w)
    }
}

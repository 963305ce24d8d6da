//! Unit formatting for reports.

/// Format a value with an SI prefix and unit, e.g. `123.4000 us`.
pub fn format_si(value: f64, unit: &str) -> String {
    let abs_value = value.abs();

    let (scaled, prefix) = if abs_value == 0.0 || !value.is_finite() {
        (value, "")
    } else if abs_value >= 1e3 {
        (value / 1e3, "k")
    } else if abs_value >= 1.0 {
        (value, "")
    } else if abs_value >= 1e-3 {
        (value * 1e3, "m")
    } else if abs_value >= 1e-6 {
        (value * 1e6, "u")
    } else if abs_value >= 1e-9 {
        (value * 1e9, "n")
    } else if abs_value >= 1e-12 {
        (value * 1e12, "p")
    } else if abs_value >= 1e-15 {
        (value * 1e15, "f")
    } else {
        return format!("{:.4e} {}", value, unit);
    };

    format!("{:.4} {}{}", scaled, prefix, unit)
}

/// Format a carrier or doping density in scientific notation (cm^-3).
pub fn format_density(value: f64) -> String {
    format!("{:.3e} cm^-3", value)
}

/// Format a recombination current density (A/cm^2) in fA/cm^2.
pub fn format_j0(value: f64) -> String {
    format!("{:.2} fA/cm^2", value * 1e15)
}

/// Linear blend `a*(1-t) + b*t`.
#[inline]
pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// Replace NaN/infinite/negative values with a safe non-negative value.
#[inline]
pub(crate) fn sanitize(v: f32) -> f32 {
    if v.is_nan() || v < 0.0 {
        0.0
    } else if v.is_infinite() {
        f32::MAX
    } else {
        v
    }
}

/// Clamp a unit value to `[0, 1]` and round to 8 bits.
#[inline]
pub(crate) fn quantize_unorm8(v: f32) -> u8 {
    let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
    (v * 255.0).round() as u8
}

/// Clamp a unit value to `[0, 1]` and round to 16 bits.
#[inline]
pub(crate) fn quantize_unorm16(v: f32) -> u16 {
    let v = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
    (v * 65535.0).round() as u16
}

/// Rec. 709 luminance of a linear RGB triple.
#[inline]
pub(crate) fn luminance(rgb: [f32; 3]) -> f32 {
    0.2126 * rgb[0] + 0.7152 * rgb[1] + 0.0722 * rgb[2]
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;

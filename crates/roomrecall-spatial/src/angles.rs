//! Angle helpers working in degrees.

/// Loop `t` so that it is never larger than `length` and never smaller
/// than `0`.
pub fn repeat(t: f32, length: f32) -> f32 {
    (t - (t / length).floor() * length).clamp(0.0, length)
}

/// Wrap an angle into `[0, 360)`.
pub fn normalize_degrees(deg: f32) -> f32 {
    let wrapped = repeat(deg, 360.0);
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Shortest signed difference from `current` to `target`, in `(-180, 180]`.
///
/// ```rust
/// use roomrecall_spatial::delta_angle;
///
/// assert_eq!(delta_angle(350.0, 10.0), 20.0);
/// assert_eq!(delta_angle(10.0, 350.0), -20.0);
/// ```
pub fn delta_angle(current: f32, target: f32) -> f32 {
    let delta = repeat(target - current, 360.0);
    if delta > 180.0 { delta - 360.0 } else { delta }
}

//! Trailing volume average.

/// Mean of the `period` volumes before each bar; the bar itself is excluded
/// so "volume above average" compares today against the recent past.
pub fn trailing_volume_average(volumes: &[i64], period: usize) -> Vec<Option<f64>> {
    let mut values = vec![None; volumes.len()];
    if period == 0 {
        return values;
    }
    let mut window_sum: i64 = 0;
    for i in 0..volumes.len() {
        if i >= period {
            values[i] = Some(window_sum as f64 / period as f64);
            window_sum -= volumes[i - period];
        }
        window_sum += volumes[i];
    }
    values
}

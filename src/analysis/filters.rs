// src/analysis/filters.rs

/// Median of a non-empty slice (sorts in place). Even lengths average the
/// two middle values.
fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Sliding median over a gappy series. The window is centered and truncated
/// at the edges; gaps inside the window are skipped, and a gap at the center
/// stays a gap.
pub fn median_filter(signal: &[Option<f64>], width: usize) -> Vec<Option<f64>> {
    if width <= 1 {
        return signal.to_vec();
    }
    let half = width / 2;
    let mut window: Vec<f64> = Vec::with_capacity(width);
    (0..signal.len())
        .map(|i| {
            signal[i]?;
            window.clear();
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(signal.len());
            window.extend(signal[lo..hi].iter().flatten());
            Some(median(&mut window))
        })
        .collect()
}

/// Sliding median over a dense series (spike removal for force data).
pub fn median_filter_dense(signal: &[f64], width: usize) -> Vec<f64> {
    if width <= 1 {
        return signal.to_vec();
    }
    let half = width / 2;
    let mut window: Vec<f64> = Vec::with_capacity(width);
    (0..signal.len())
        .map(|i| {
            window.clear();
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(signal.len());
            window.extend_from_slice(&signal[lo..hi]);
            median(&mut window)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_removes_spike() {
        let sig = vec![1.0, 1.0, 50.0, 1.0, 1.0];
        assert_eq!(median_filter_dense(&sig, 3), vec![1.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_median_keeps_gaps() {
        let sig = vec![Some(1.0), None, Some(3.0), Some(30.0), Some(5.0)];
        let out = median_filter(&sig, 3);
        assert_eq!(out[1], None);
        // window of frame 2 is [gap, 3, 30] -> median of [3, 30]
        assert_eq!(out[2], Some(16.5));
        assert_eq!(out[3], Some(5.0));
        assert_eq!(out[4], Some(17.5));
    }

    #[test]
    fn test_width_one_is_identity() {
        let sig = vec![Some(2.0), None];
        assert_eq!(median_filter(&sig, 1), sig);
    }
}

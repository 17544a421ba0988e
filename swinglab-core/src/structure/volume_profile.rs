//! Volume-by-price histogram and its point of control (POC).

use crate::domain::Bar;

/// Bin edges span the window's low..high; each bar's close drops its volume
/// into one bin. The POC is the midpoint of the heaviest bin.
pub fn point_of_control(bars: &[Bar], window: usize, bins: usize) -> Option<f64> {
    if bars.is_empty() || bins == 0 {
        return None;
    }
    let tail = &bars[bars.len().saturating_sub(window)..];
    let lo = tail.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let hi = tail.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    if !(hi > lo) {
        return None;
    }

    let width = (hi - lo) / bins as f64;
    let mut hist = vec![0.0_f64; bins];
    for bar in tail {
        let idx = ((bar.close - lo) / width).floor();
        let idx = (idx.max(0.0) as usize).min(bins - 1);
        hist[idx] += bar.volume as f64;
    }

    let (best, _) = hist
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |acc, (i, v)| if *v > acc.1 { (i, *v) } else { acc });
    Some(lo + width * (best as f64 + 0.5))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn heavy_volume_level_wins() {
        let mut closes: Vec<f64> = (0..49).map(|i| 100.0 + (i % 10) as f64).collect();
        closes.push(104.0);
        let mut bars = make_bars(&closes);
        for bar in bars.iter_mut().filter(|b| (b.close - 104.0).abs() < 1e-9) {
            bar.volume = 1_000_000;
        }
        let poc = point_of_control(&bars, 50, 30).unwrap();
        assert!((poc - 104.0).abs() < 0.5, "poc={poc}");
    }

    #[test]
    fn empty_or_flat_range_has_no_poc() {
        assert!(point_of_control(&[], 50, 30).is_none());
    }
}

/// One draw-down-and-recovery cycle, as indices into a day's sample series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draw {
    pub start: usize,
    pub end: usize,
}

/// Finds falling sequences with a causal 3-point window.
///
/// A draw starts when the current value is below both previous values and
/// the window dropped by at least `threshold`; the recorded start is the
/// first index of that window. It ends at the first value above both previous
/// values. A draw still falling at the end of the series is dropped.
pub fn detect_draws(values: &[f64], threshold: f64) -> Vec<Draw> {
    let mut draws = Vec::new();
    let mut start: Option<usize> = None;

    for i in 2..values.len() {
        let (prev_prev, prev, actual) = (values[i - 2], values[i - 1], values[i]);

        match start {
            None => {
                if actual < prev && actual < prev_prev && prev_prev - actual >= threshold {
                    start = Some(i - 2);
                }
            }
            Some(s) => {
                if actual > prev && actual > prev_prev {
                    draws.push(Draw { start: s, end: i });
                    start = None;
                }
            }
        }
    }
    draws
}

//! Gap interpolation for aligned window series.

/// Fill missing runs in a slot series, or signal that the series is
/// unusable.
///
/// Interior runs of up to `max_run` consecutive missing slots are
/// bridged by linear interpolation between the surrounding known
/// values; edge runs are padded with the nearest known value. Any run
/// longer than `max_run` (or a series with no known value at all)
/// returns `None`, telling the caller to exclude the series from
/// correlation.
pub fn fill_gaps(slots: &[Option<f64>], max_run: usize) -> Option<Vec<f64>> {
    if slots.iter().all(|s| s.is_none()) {
        return None;
    }

    let mut filled: Vec<f64> = Vec::with_capacity(slots.len());
    let n = slots.len();
    let mut i = 0;

    while i < n {
        match slots[i] {
            Some(value) => {
                filled.push(value);
                i += 1;
            }
            None => {
                let start = i;
                while i < n && slots[i].is_none() {
                    i += 1;
                }
                let run = i - start;
                if run > max_run {
                    return None;
                }

                let left = if start > 0 { slots[start - 1] } else { None };
                let right = if i < n { slots[i] } else { None };
                match (left, right) {
                    (Some(l), Some(r)) => {
                        let segments = (run + 1) as f64;
                        for j in 0..run {
                            let t = (j + 1) as f64 / segments;
                            filled.push(l + t * (r - l));
                        }
                    }
                    (Some(l), None) => filled.extend(std::iter::repeat(l).take(run)),
                    (None, Some(r)) => filled.extend(std::iter::repeat(r).take(run)),
                    (None, None) => unreachable!("all-missing series handled above"),
                }
            }
        }
    }

    Some(filled)
}

/// Index of the largest item, the first one wins on ties.
///
/// Incomparable values (NaN) never replace the current maximum.
pub fn argmax<T: PartialOrd>(iter: impl Iterator<Item = T>) -> Option<usize> {
    let mut best: Option<(usize, T)> = None;
    for (i, v) in iter.enumerate() {
        match &best {
            Some((_, max)) if v.partial_cmp(max) != Some(std::cmp::Ordering::Greater) => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod test {
    use super::argmax;

    #[test]
    fn first_max() {
        assert_eq!(argmax([1.0, 3.0, 3.0, 2.0].into_iter()), Some(1));
        assert_eq!(argmax([0.0, 0.0, 0.0].into_iter()), Some(0));
        assert_eq!(argmax([-1.0, f64::NAN, -0.5].into_iter()), Some(2));
        assert_eq!(argmax(std::iter::empty::<f64>()), None);
    }
}

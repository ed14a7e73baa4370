use proptest::prelude::*;
use stewart_core::SmoothingFilter;

proptest! {
    #[test]
    fn output_stays_within_window_extremes(
        window in 5usize..=50,
        samples in prop::collection::vec(0u16..=1023, 1..200),
    ) {
        let mut f = SmoothingFilter::new(window);
        for (i, &s) in samples.iter().enumerate() {
            let out = f.push(s);
            let start = (i + 1).saturating_sub(window);
            let recent = &samples[start..=i];
            let lo = *recent.iter().min().unwrap();
            let hi = *recent.iter().max().unwrap();
            prop_assert!(out >= lo && out <= hi, "out {} not in [{}, {}]", out, lo, hi);
        }
    }

    #[test]
    fn total_matches_last_window(
        window in 5usize..=50,
        samples in prop::collection::vec(0u16..=1023, 1..200),
    ) {
        let mut f = SmoothingFilter::new(window);
        for &s in &samples {
            f.push(s);
        }
        let start = samples.len().saturating_sub(window);
        let expected: u32 = samples[start..].iter().map(|&v| u32::from(v)).sum();
        prop_assert_eq!(f.total(), expected);
        prop_assert_eq!(f.is_primed(), samples.len() >= window);
    }

    #[test]
    fn constant_input_is_a_fixed_point(window in 5usize..=50, v in 0u16..=1023) {
        let mut f = SmoothingFilter::new(window);
        for _ in 0..window {
            prop_assert_eq!(f.push(v), v);
        }
    }
}

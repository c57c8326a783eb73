/// Per-search tri-state result cache.
///
/// Each node id gets three bits spread over three bitsets: whether it has
/// been evaluated, and whether it came out true or false. An evaluated id
/// with neither value bit set is an undefined result. The buffers are zeroed
/// in place by [`ResultCache::reset`] so one cache can serve many searches.
#[derive(Debug, Default)]
pub(crate) struct ResultCache {
    evaluated: Vec<u64>,
    passed: Vec<u64>,
    failed: Vec<u64>,
}

impl ResultCache {
    const BITS_PER_BUCKET: usize = u64::BITS as usize;

    pub fn reset(&mut self, nodes: usize) {
        let buckets = nodes / Self::BITS_PER_BUCKET + 1;
        for bits in [&mut self.evaluated, &mut self.passed, &mut self.failed] {
            bits.clear();
            bits.resize(buckets, 0);
        }
    }

    #[inline]
    pub fn is_evaluated(&self, id: usize) -> bool {
        Self::get_bit(&self.evaluated, id) != 0u64
    }

    #[inline]
    pub fn set(&mut self, id: usize, result: Option<bool>) {
        match result {
            Some(true) => Self::set_bit(&mut self.passed, id),
            Some(false) => Self::set_bit(&mut self.failed, id),
            None => {}
        }

        Self::set_bit(&mut self.evaluated, id);
    }

    #[inline]
    pub fn get(&self, id: usize) -> Option<bool> {
        debug_assert!(self.is_evaluated(id));
        let failed = Self::get_bit(&self.failed, id) != 0u64;
        let passed = Self::get_bit(&self.passed, id) != 0u64;
        if !failed && !passed {
            return None;
        }
        Some(!failed && passed)
    }

    #[inline]
    fn set_bit(bits: &mut [u64], id: usize) {
        let position = id % Self::BITS_PER_BUCKET;
        bits[id / Self::BITS_PER_BUCKET] |= 1u64 << position;
    }

    #[inline]
    fn get_bit(bits: &[u64], id: usize) -> u64 {
        let bucket = bits[id / Self::BITS_PER_BUCKET];
        let position = id % Self::BITS_PER_BUCKET;
        bucket & (1u64 << position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE_LESS_THAN_ONE_BUCKET: usize = 15;
    const SIZE: usize = 128;
    const AN_ID: usize = 1;
    const AN_ID_IN_A_LATER_BUCKET: usize = 67;

    fn a_cache(size: usize) -> ResultCache {
        let mut cache = ResultCache::default();
        cache.reset(size);
        cache
    }

    #[test]
    fn can_hold_fewer_ids_than_one_bucket() {
        let mut results = a_cache(SIZE_LESS_THAN_ONE_BUCKET);

        results.set(AN_ID, Some(false));

        assert!(results.is_evaluated(AN_ID));
        assert_eq!(Some(false), results.get(AN_ID));
    }

    #[test]
    fn unevaluated_ids_report_as_such() {
        let results = a_cache(SIZE);

        assert!(!results.is_evaluated(AN_ID));
    }

    #[test]
    fn can_store_a_true_result() {
        let mut results = a_cache(SIZE);

        results.set(AN_ID, Some(true));

        assert!(results.is_evaluated(AN_ID));
        assert_eq!(Some(true), results.get(AN_ID));
    }

    #[test]
    fn can_store_a_false_result() {
        let mut results = a_cache(SIZE);

        results.set(AN_ID, Some(false));

        assert!(results.is_evaluated(AN_ID));
        assert_eq!(Some(false), results.get(AN_ID));
    }

    #[test]
    fn can_store_an_undefined_result() {
        let mut results = a_cache(SIZE);

        results.set(AN_ID, None);

        assert!(results.is_evaluated(AN_ID));
        assert_eq!(None, results.get(AN_ID));
    }

    #[test]
    fn can_store_an_id_beyond_the_first_bucket() {
        let mut results = a_cache(SIZE);

        results.set(AN_ID_IN_A_LATER_BUCKET, Some(false));

        assert!(results.is_evaluated(AN_ID_IN_A_LATER_BUCKET));
        assert_eq!(Some(false), results.get(AN_ID_IN_A_LATER_BUCKET));
    }

    #[test]
    fn reset_clears_previous_results_and_resizes() {
        let mut results = a_cache(SIZE);
        results.set(AN_ID, Some(true));

        results.reset(SIZE * 2);

        assert!(!results.is_evaluated(AN_ID));
    }
}

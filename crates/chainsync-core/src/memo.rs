//! Value memoization keyed by dependency values.

/// Caches one value and recomputes it only when its dependencies change.
///
/// Dependencies are compared by value, so rebuilding equal dependencies
/// (e.g. the same timestamp string) reuses the cached value.
#[derive(Debug, Clone)]
pub struct Memo<D, T> {
    cached: Option<(D, T)>,
    recomputations: u64,
}

impl<D, T> Default for Memo<D, T> {
    fn default() -> Self {
        Self {
            cached: None,
            recomputations: 0,
        }
    }
}

impl<D: PartialEq, T> Memo<D, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `deps`, computing it with `f` if needed.
    pub fn get_or_compute(&mut self, deps: D, f: impl FnOnce(&D) -> T) -> &T {
        match self.try_get_or_compute(deps, |d| Ok::<T, std::convert::Infallible>(f(d))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible variant of [`Memo::get_or_compute`]. On error nothing is cached.
    pub fn try_get_or_compute<E>(
        &mut self,
        deps: D,
        f: impl FnOnce(&D) -> Result<T, E>,
    ) -> Result<&T, E> {
        let entry = match self.cached.take() {
            Some((cached_deps, value)) if cached_deps == deps => (cached_deps, value),
            _ => {
                let value = f(&deps)?;
                self.recomputations += 1;
                (deps, value)
            }
        };
        let (_, value) = self.cached.insert(entry);
        Ok(value)
    }

    /// Number of times the value has been (re)computed.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    /// Drop the cached value.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recomputes_only_on_change() {
        let mut memo: Memo<String, String> = Memo::new();
        assert_eq!(memo.get_or_compute("a".into(), |d| d.to_uppercase()), "A");
        assert_eq!(memo.get_or_compute("a".into(), |_| unreachable!()), "A");
        assert_eq!(memo.recomputations(), 1);

        assert_eq!(memo.get_or_compute("b".into(), |d| d.to_uppercase()), "B");
        assert_eq!(memo.recomputations(), 2);
    }

    #[test]
    fn failure_is_not_cached() {
        let mut memo: Memo<u32, u32> = Memo::new();
        assert!(memo.try_get_or_compute(1, |_| Err::<u32, &str>("bad")).is_err());
        assert_eq!(memo.recomputations(), 0);
        assert_eq!(*memo.try_get_or_compute(1, |d| Ok::<_, &str>(d * 10)).unwrap(), 10);
    }

    #[test]
    fn invalidate_forces_recompute() {
        let mut memo: Memo<u32, u32> = Memo::new();
        memo.get_or_compute(1, |d| *d);
        memo.invalidate();
        memo.get_or_compute(1, |d| *d);
        assert_eq!(memo.recomputations(), 2);
    }
}

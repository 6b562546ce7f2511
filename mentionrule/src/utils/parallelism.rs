//! Iterators which run on rayon's thread pool if the `parallel` feature is enabled and sequentially otherwise.

#[cfg(feature = "parallel")]
mod inner {
    use rayon::prelude::*;

    pub trait MaybeParallelIterator {
        type Iter;

        fn into_maybe_par_iter(self) -> Self::Iter;
    }

    impl<T: IntoParallelIterator> MaybeParallelIterator for T {
        type Iter = T::Iter;

        fn into_maybe_par_iter(self) -> Self::Iter {
            self.into_par_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
mod inner {
    pub trait MaybeParallelIterator {
        type Iter;

        fn into_maybe_par_iter(self) -> Self::Iter;
    }

    impl<T: IntoIterator> MaybeParallelIterator for T {
        type Iter = T::IntoIter;

        fn into_maybe_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

pub use inner::*;

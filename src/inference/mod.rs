//! inference — dynamic-programming primitives for discrete-state HMMs.
//!
//! Purpose
//! -------
//! Compute posterior quantities of a single sequence given an initial
//! distribution, transition matrices and per-step conditional
//! log-likelihoods. Model types in [`crate::hmm`] only build those three
//! inputs; everything that walks the time axis lives here.
//!
//! Key behaviors
//! -------------
//! - [`hmm_filter`]: scaled forward recursion returning the marginal
//!   log-likelihood plus filtered and predicted marginals.
//! - [`hmm_smoother`]: one backward pass over filtered/predicted marginals.
//! - [`hmm_two_filter_smoother`]: forward filter combined with a normalized
//!   backward filter; used by the E-step.
//! - [`hmm_posterior_mode`]: Viterbi decoding in log space.
//! - [`compute_transition_probs`]: expected transition counts, either summed
//!   over time ([`TransitionProbs::Summed`]) or per step
//!   ([`TransitionProbs::PerStep`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are validated on every call: initial length K, transitions K×K
//!   or (T−1)×K×K, log-likelihoods T×K with T ≥ 1, probabilities finite and
//!   non-negative, log-likelihoods never NaN or +∞ (−∞ marks an impossible
//!   emission).
//! - Every returned marginal row sums to one.
//!
//! Conventions
//! -----------
//! - Transition tensors index `[t, from, to]`; entry `t` moves from step `t`
//!   to step `t + 1`.
//! - The rank of [`TransitionMatrices`] decides whether transition statistics
//!   are reduced over time.
//! - Functions are pure: no logging, no global state.
//!
//! Testing notes
//! -------------
//! - Filter output is checked against brute-force path enumeration.
//! - The two smoothers are checked against each other, and transition
//!   statistics against the smoothed marginals.

pub mod errors;
pub mod filter;
pub mod smoother;
pub mod transitions;
pub mod validation;
pub mod viterbi;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::errors::{InferenceError, InferenceResult};
pub use self::filter::{FilterPosterior, hmm_filter};
pub use self::smoother::{SmoothedPosterior, hmm_smoother, hmm_two_filter_smoother};
pub use self::transitions::{TransitionMatrices, TransitionProbs, compute_transition_probs};
pub use self::viterbi::hmm_posterior_mode;

//! rust_hmm — EM and SGD parameter estimation for hidden Markov models.
//!
//! Purpose
//! -------
//! Estimate the parameters of discrete-state HMMs from batches of
//! equal-length sequences. The crate is organized in three layers:
//!
//! - [`optimization`]: numerically stable transforms, an argmin-backed
//!   L-BFGS maximizer, and a minibatch Adam runner.
//! - [`inference`]: forward filtering, smoothing, Viterbi decoding and
//!   transition statistics for a single sequence.
//! - [`hmm`]: parameters, distributions, the model interface, and the EM /
//!   SGD training loops.
//!
//! Conventions
//! -----------
//! - Arrays are `ndarray` types in `f64`; sequences are `T×D`, batches
//!   `N×T×D`.
//! - Errors are typed per layer (`OptError`, `InferenceError`, `HmmError`)
//!   and convert upward; library code does not panic on bad input.
//! - Logging goes through `tracing`; no subscriber is installed here.

pub mod hmm;
pub mod inference;
pub mod optimization;

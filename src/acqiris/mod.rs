//! Waveform digitizer and delay-line detector processors (§4.K): constant-fraction peak
//! finding on raw Acqiris traces, TDC hit counting, and delay-line position reconstruction.

pub mod delayline;
pub mod waveform;

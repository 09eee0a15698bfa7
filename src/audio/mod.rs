/*!
 * Audio primitives: the interleaved sample buffer and WAV file I/O.
 */

pub mod buffer;
pub mod wav;

pub use buffer::{db_to_linear, linear_to_db, secs_to_frames, AudioBuffer};
pub use wav::{read_wav, write_wav};

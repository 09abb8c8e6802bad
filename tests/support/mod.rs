pub mod mp3;
pub mod wav;

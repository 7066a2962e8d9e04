pub mod access_unit;
pub mod constants;
pub mod encode_error;
pub mod encode_settings;
pub mod frame;
pub mod track_descriptor;

pub mod info_overlay;
pub mod now_playing;
pub mod station_list;

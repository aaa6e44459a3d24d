pub mod community_handler;

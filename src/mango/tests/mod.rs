mod decoder_test;
mod events_test;

pub mod bitcoin_data;

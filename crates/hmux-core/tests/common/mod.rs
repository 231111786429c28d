pub mod test_server;

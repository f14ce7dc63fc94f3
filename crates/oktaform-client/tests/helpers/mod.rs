pub mod mock_okta_server;

mod handler_test;

mod destination_test;

mod popup_tests;

mod panel_tests;

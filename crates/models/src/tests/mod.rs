/// Preference name validation and resolution
pub mod name_tests;

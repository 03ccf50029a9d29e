//! Built-in calculators provided by the formflow engine.

// Loan & investment calculators
pub mod emi;
pub mod inflation_fv;
pub mod loan_from_emi;
pub mod sip;

// Calendar calculators
pub mod age;
pub mod months_between;

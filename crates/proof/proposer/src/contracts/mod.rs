//! L1 contract bindings.

mod output_oracle;
pub use output_oracle::{
    IOutputOracle, OracleState, OutputOracleCaller, OutputOracleClient, OutputProposal,
    propose_l2_output_calldata,
};

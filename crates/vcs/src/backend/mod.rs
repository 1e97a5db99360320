pub mod git;
pub mod mercurial;

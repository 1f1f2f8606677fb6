mod accounts;
mod backend;
mod tokens;
mod topics;
mod transfers;

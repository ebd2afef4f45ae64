mod admin;
mod checkout;
mod device_config;
mod helpers;
mod mocks;
mod webhook;

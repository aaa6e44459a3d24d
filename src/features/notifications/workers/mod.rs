mod demo_generator;

pub use demo_generator::DemoNotificationGenerator;

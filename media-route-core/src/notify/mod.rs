pub mod change_notifier;

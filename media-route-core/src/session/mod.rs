pub mod output_switch;

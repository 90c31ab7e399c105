//! Command-contributing plugin with a few small commands.

use ember_sdk::{command, export_plugin, handler, Args, Channel, RawCommand, Registration};

handler!(fn dummy => dummy_impl);
handler!(fn addi => addi_impl);
handler!(fn addf => addf_impl);
handler!(fn echo => echo_impl);

static COMMANDS: [RawCommand; 4] = [
    command!("dummy", "", "Simple example command.", dummy),
    command!("addi", "dd", "Add two integers.", addi),
    command!("addf", "ff", "Add two floats.", addf),
    command!("echo", "s", "Repeat one word back.", echo),
];

fn dummy_impl(channel: &mut Channel<'_>, _args: &Args<'_>) -> i32 {
    channel.send_line("I'm a dummy.");
    0
}

fn addi_impl(channel: &mut Channel<'_>, args: &Args<'_>) -> i32 {
    match (args.integer(0), args.integer(1)) {
        (Some(a), Some(b)) => match a.checked_add(b) {
            Some(sum) => {
                channel.send_line(&sum.to_string());
                0
            }
            None => {
                channel.send_line("Integer overflow.");
                1
            }
        },
        _ => 1,
    }
}

fn addf_impl(channel: &mut Channel<'_>, args: &Args<'_>) -> i32 {
    match (args.float(0), args.float(1)) {
        (Some(a), Some(b)) => {
            channel.send_line(&(a + b).to_string());
            0
        }
        _ => 1,
    }
}

fn echo_impl(channel: &mut Channel<'_>, args: &Args<'_>) -> i32 {
    match args.text(0) {
        Some(word) => {
            channel.send_line(word);
            0
        }
        None => 1,
    }
}

fn entry(mut registration: Registration<'_>, _channel: Channel<'_>) {
    if !registration.is_registered() {
        registration.declare_commands(&COMMANDS);
    }
}

export_plugin!(entry);
